pub mod command_service;
pub mod node_service;
pub mod pending;
pub mod replies;
pub mod transfer_service;

pub use command_service::CommandService;
pub use node_service::NodeService;
pub use transfer_service::TransferService;
