//! Accounts, sessions, bucket lists and friendships.

mod account;
pub mod bucket_list;
pub mod friends;
mod password;
mod session;

pub use account::{
    authenticate, delete_user, get_user, login, register, search_users_by_email, update_details,
    AuthResult, UpdateUserOptions, User, UserError,
};
pub use friends::{FriendError, Friendship, FriendshipStatus};
pub use password::{hash_password, verify_password};
pub use session::{Claims, SessionError, SessionKeys, DEFAULT_TOKEN_TTL_HOURS};
