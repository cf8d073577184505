pub mod folders;
pub mod logout;
pub mod pull;
pub mod push;
pub mod status;
