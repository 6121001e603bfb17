pub mod assertion;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod hooks;
pub mod proxy;
pub mod redirect;
pub mod request;
pub mod service_url;
pub mod validator;

pub use assertion::{Assertion, AttributePrincipal, Attributes};
pub use config::{CasConfig, ConfigSource};
pub use engine::{AuthenticationEngine, CONST_CAS_ASSERTION, RequestState};
pub use error::{CasConfigError, CasError};
pub use gateway::{GatewayResolver, SessionGatewayResolver};
pub use hooks::{AuthenticationHooks, NoopHooks};
pub use proxy::{InMemoryProxyGrantingTicketStorage, ProxyGrantingTicketStorage};
pub use redirect::{AuthenticationRedirectStrategy, DefaultRedirectStrategy, XhrAwareRedirectStrategy};
pub use request::RequestInfo;
pub use validator::{Cas20ProxyTicketValidator, TicketValidationError, TicketValidator};
