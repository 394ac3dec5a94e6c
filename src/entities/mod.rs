//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod notification;
pub mod plan;
pub mod plan_category_limit;
pub mod plan_expense;
pub mod plan_invite;
pub mod plan_member;
pub mod user;

// Re-export specific types to avoid conflicts
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
    NotificationKind,
};
pub use plan::{Column as PlanColumn, Entity as Plan, Model as PlanModel};
pub use plan_category_limit::{
    Column as PlanCategoryLimitColumn, Entity as PlanCategoryLimit,
    Model as PlanCategoryLimitModel,
};
pub use plan_expense::{
    Column as PlanExpenseColumn, Entity as PlanExpense, ExpenseStatus, Model as PlanExpenseModel,
};
pub use plan_invite::{
    Column as PlanInviteColumn, Entity as PlanInvite, InviteStatus, Model as PlanInviteModel,
};
pub use plan_member::{
    Column as PlanMemberColumn, Entity as PlanMember, Model as PlanMemberModel, PlanRole,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
