//! User and client administration.

pub mod clients;
pub mod users;

pub use clients::{attach_user_counts, Client, ClientListView};
pub use users::{guard_delete_user, NewUser, PasswordChange, User, UserListView, UserUpdate};
