pub mod db;
pub mod mail;
pub mod memory;
pub mod token;

pub use db::DbAdapter;
pub use mail::{ConsoleMailAdapter, MemoryMailAdapter, SentMail, SmtpMailAdapter};
pub use memory::MemoryStore;
pub use token::SignerAdapter;
