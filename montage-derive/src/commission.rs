extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

use super::utils::*;

/// Each handler method on the decorated `impl` becomes one commission
/// action: `fn get_signals(&mut self, range: (f64, f64)) -> SignalCachePart`
/// becomes a `Request::GetSignals { range: (f64, f64) }` /
/// `Response::GetSignals(SignalCachePart)` pair plus a `dispatch` match arm,
/// serde-tagged so the variant name round-trips to the same kebab-case
/// spelling `protocol::Action` uses. Only synchronous handlers are
/// supported -- the macro targets a worker's thin dispatch-table wrapper
/// methods, not [`montage_core::MontageProcessor`]'s async getters directly.
struct Commission<'a> {
    ast: &'a syn::ItemImpl,
    idents: Vec<syn::Ident>,
    idents_cap: Vec<syn::Ident>,
    args: Vec<Vec<syn::Pat>>,
    args_ty: Vec<Vec<syn::Type>>,
    outputs: Vec<Option<syn::Type>>,
}

impl<'a> Commission<'a> {
    fn new(ast: &'a syn::ItemImpl) -> Self {
        let signatures = ast.items.iter().filter_map(|item| match item {
            syn::ImplItem::Method(item) => Some(&item.sig),
            _ => None,
        });

        let (mut idents, mut idents_cap, mut args, mut args_ty, mut outputs) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());

        for sig in signatures {
            let (mut a, mut a_t) = (Vec::new(), Vec::new());
            let mut has_self = false;
            for arg in sig.inputs.iter() {
                match arg {
                    syn::FnArg::Typed(arg) => {
                        a.push((*arg.pat).clone());
                        a_t.push((*arg.ty).clone());
                    }
                    syn::FnArg::Receiver(_) => has_self = true,
                }
            }
            if !has_self || sig.asyncness.is_some() {
                continue;
            }

            let ident = sig.ident.clone();
            args.push(a);
            args_ty.push(a_t);
            idents_cap.push(to_camel_ident(&ident));
            idents.push(ident);
            outputs.push(match sig.output.clone() {
                syn::ReturnType::Default => None,
                syn::ReturnType::Type(_, ty) => Some(*ty),
            });
        }

        Self {
            ast,
            idents,
            idents_cap,
            args,
            args_ty,
            outputs,
        }
    }

    fn generate(&self) -> TokenStream {
        let ast = &self.ast;
        let (types, dispatch) = (self.types(), self.dispatch());

        (quote! {
            #ast

            pub mod commission {
                use super::*;
                use serde::{Serialize, Deserialize};

                #types
                #dispatch
            }
        })
        .into()
    }

    fn types(&self) -> TokenStream2 {
        let Self {
            idents_cap,
            args,
            args_ty,
            outputs,
            ..
        } = self;

        let requests = args.iter().zip(args_ty.iter()).zip(idents_cap.iter()).map(
            |((args, tys), ident)| {
                if args.is_empty() {
                    quote! { #ident }
                } else {
                    quote! { #ident { #(#args: #tys),* } }
                }
            },
        );

        let responses = outputs.iter().zip(idents_cap).map(|(output, ident)| match output {
            None => quote! { #ident },
            Some(t) => quote! { #ident(#t) },
        });

        quote! {
            #[derive(Debug, Serialize, Deserialize)]
            #[serde(tag = "action", rename_all = "kebab-case")]
            pub enum Request {
                #(#requests,)*
            }

            #[derive(Debug, Clone, Serialize, Deserialize)]
            #[serde(rename_all = "kebab-case")]
            pub enum Response {
                #(#responses,)*
            }
        }
    }

    fn dispatch(&self) -> TokenStream2 {
        let Self {
            ast,
            idents,
            idents_cap,
            args,
            outputs,
            ..
        } = self;
        let ty = &*ast.self_ty;
        let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

        let arms = outputs.iter().enumerate().map(|(i, output)| {
            let (ident, ident_cap, args) = (&idents[i], &idents_cap[i], &args[i]);
            let call = if args.is_empty() {
                quote! { Request::#ident_cap }
            } else {
                quote! { Request::#ident_cap { #(#args),* } }
            };
            match output {
                None => quote! { #call => { self.#ident(#(#args),*); Response::#ident_cap } },
                Some(_) => quote! { #call => Response::#ident_cap(self.#ident(#(#args),*)) },
            }
        });

        quote! {
            impl #impl_generics #ty #ty_generics #where_clause {
                /// Route one already-deserialized [`Request`] to its
                /// handler, returning the matching [`Response`] variant.
                pub fn dispatch(&mut self, request: Request) -> Response {
                    match request {
                        #(#arms,)*
                    }
                }
            }
        }
    }
}

pub fn commission_actions(_attrs: TokenStream, input: TokenStream) -> TokenStream {
    let ast = syn::parse::<syn::ItemImpl>(input).unwrap();
    Commission::new(&ast).generate()
}
