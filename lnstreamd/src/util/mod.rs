mod rpc_cookie;
pub mod testing;

pub use rpc_cookie::get_rpc_credentials;

pub use lnstream_util::env_var::*;
pub use lnstream_util::util::{abort_on_panic, read_secret_file};
