use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, FnArg, Ident, ItemFn, ReturnType};

fn check_signature(func: &ItemFn) -> Result<(), syn::Error> {
    let sig = &func.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(asyncness, "components cannot be async"));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "components cannot be generic",
        ));
    }
    if let Some(receiver) = sig.inputs.iter().find(|arg| matches!(arg, FnArg::Receiver(_))) {
        return Err(syn::Error::new_spanned(receiver, "components cannot take self"));
    }
    if sig.inputs.len() != 2 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "components take `(props: &Props, context: &Context)`",
        ));
    }
    if matches!(sig.output, ReturnType::Default) {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "components return `RenderResult`",
        ));
    }
    Ok(())
}

/// Turns a render function into a function component.
///
/// ```ignore
/// #[component]
/// fn Greeting(props: &Props, _context: &Context) -> RenderResult {
///     Ok(h("p", None, [props.get("name").and_then(Value::to_text)]))
/// }
///
/// let tree = h(Greeting(), attrs! { "name" => "Ada" }, Vec::<Child>::new());
/// ```
///
/// The annotated name becomes a function returning the component's
/// `ComponentType`. Each annotated function has its own identity, even when
/// two bodies are identical.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr_tokens = TokenStream2::from(attr);
    if !attr_tokens.is_empty() {
        return syn::Error::new_spanned(attr_tokens, "unsupported component attribute")
            .to_compile_error()
            .into();
    }

    let func = parse_macro_input!(item as ItemFn);
    if let Err(err) = check_signature(&func) {
        return err.to_compile_error().into();
    }

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;
    let name = sig.ident.clone();
    let name_str = name.to_string();
    let render_ident = Ident::new(&format!("__arbor_render_{}", name), Span::call_site());
    let marker_ident = Ident::new(&format!("__ArborMarker{}", name), Span::call_site());
    let inputs = &sig.inputs;
    let output = &sig.output;

    let expanded = quote! {
        #(#attrs)*
        #[allow(non_snake_case)]
        #vis fn #name() -> ::arbor_core::ComponentType {
            struct #marker_ident;

            #[allow(non_snake_case)]
            fn #render_ident(#inputs) #output #block

            ::arbor_core::ComponentType::from_fn::<#marker_ident>(#name_str, #render_ident)
        }
    };

    expanded.into()
}
