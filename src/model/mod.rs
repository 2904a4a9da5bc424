pub mod chat;
pub mod mutation;
pub mod patch;
pub mod remote;
pub mod work_item;
