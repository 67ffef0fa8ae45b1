pub mod blog;
pub mod category;
pub mod comment;
pub mod like;
pub mod user;

pub use blog::Blog;
pub use category::Category;
pub use comment::Comment;
pub use like::Like;
pub use user::User;
