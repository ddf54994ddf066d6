pub mod claims;
pub mod codec;
pub mod errors;
pub mod instance;
pub mod role;
pub mod route;
pub mod store;
pub mod time;

pub use claims::{Claims, IssuerScope};
pub use codec::{CodecError, CredentialCodec, VerifyError};
pub use errors::StoreError;
pub use instance::ServiceInstance;
pub use role::{Role, permits};
pub use route::{RouteParseError, RouteRule, RouteTable};
pub use store::{NewProduct, NewUser, Product, ProductPatch, ProductStore, User, UserStore};
