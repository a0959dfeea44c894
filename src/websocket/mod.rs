pub mod fanout;
pub mod handler;
pub mod msg_change_handler;
pub mod msg_cursor_handler;
pub mod msg_lock_handler;
pub mod msg_ping_handler;

pub use handler::websocket_handler;
