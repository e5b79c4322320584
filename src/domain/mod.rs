pub mod author_names;
pub mod dates;
pub mod isbn;
pub mod keys;
pub mod models;
pub mod slug;
