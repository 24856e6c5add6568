use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Ident, ItemFn, LitStr};

/// Test attribute used across `rxkernel`.
///
/// Sync tests expand to `#[test]`, async tests to `#[tokio::test]` with the
/// requested flavor (`local` for a current-thread runtime, `shared` for a
/// multi-thread one). Every test installs a `tracing` subscriber writing to
/// the test output, filtered by `RUST_LOG`.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let mut input = parse_macro_input!(item as ItemFn);

  let is_async = input.sig.asyncness.is_some();

  let raw_args = proc_macro2::TokenStream::from(attr);
  let tokio_args = if raw_args.is_empty() {
    proc_macro2::TokenStream::new()
  } else {
    if !is_async {
      return TokenStream::from(
        syn::Error::new(
          raw_args.span(),
          "rxkernel_macro::test flavor args are only supported for async tests. Use \
           #[rxkernel_macro::test] for sync tests, or make the function async.",
        )
        .to_compile_error(),
      );
    }

    let flavor = if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
      (ident.to_string(), ident.span())
    } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
      (lit.value(), lit.span())
    } else {
      return TokenStream::from(
        syn::Error::new(
          raw_args.span(),
          "rxkernel_macro::test only accepts: #[rxkernel_macro::test], \
           #[rxkernel_macro::test(local)], #[rxkernel_macro::test(shared)], or string equivalents",
        )
        .to_compile_error(),
      );
    };

    match flavor.0.as_str() {
      "local" => quote!(flavor = "current_thread"),
      "shared" => quote!(flavor = "multi_thread", worker_threads = 2),
      _ => {
        return TokenStream::from(
          syn::Error::new(flavor.1, "rxkernel_macro::test flavor must be `local` or `shared`")
            .to_compile_error(),
        );
      }
    }
  };

  let init_tracing: syn::Stmt = syn::parse_quote! {
    let _ = ::tracing_subscriber::fmt()
      .with_test_writer()
      .with_env_filter(::tracing_subscriber::EnvFilter::from_default_env())
      .try_init();
  };
  input.block.stmts.insert(0, init_tracing);

  let native_attr = if is_async { quote!(tokio::test(#tokio_args)) } else { quote!(test) };

  let expanded = quote! {
      #[#native_attr]
      #input
  };

  TokenStream::from(expanded)
}
