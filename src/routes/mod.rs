mod auth;
mod health_check;

pub use auth::{
    all_users, change_password, current_user, logged_in_users, login, logout, refresh, signup,
    update_profile,
};
pub use health_check::health_check;
