pub mod account;
pub mod usage;

pub use account::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
pub use usage::{
    AdminDashboardResponse, AdminUserRow, IngestParams, IngestResponse, UserDashboardQuery,
    UserDashboardResponse,
};
