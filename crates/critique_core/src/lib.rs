pub mod domain;
pub mod policy;
pub mod ports;

pub use domain::{AccessClaims, Category, Comment, Genre, Review, Role, Title, User};
pub use policy::{decide, Action, Decision, Resource};
pub use ports::{DatabaseService, MailService, PortError, PortResult, TokenService};
