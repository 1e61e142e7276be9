//! Proc-macro companion to `montage-core`: generates the commission
//! request/response enums and dispatch table for a worker's handler impl
//! from a plain `impl` block, the same way a `#[service]`-style macro
//! generates an RPC `Request`/`Response` pair from method signatures.

extern crate proc_macro;

mod commission;
mod utils;

use proc_macro::TokenStream;

/// Turn every synchronous `&mut self` method on the decorated `impl` block
/// into one commission action: a
/// `commission::Request`/`commission::Response` variant plus a `dispatch`
/// method routing between them.
#[proc_macro_attribute]
pub fn commission_actions(attrs: TokenStream, input: TokenStream) -> TokenStream {
    commission::commission_actions(attrs, input)
}
