use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::spanned::Spanned;

pub fn derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let result = match &input.data {
        syn::Data::Struct(s) => container_is_scalar(&input).and_then(|scalar| {
            if scalar {
                Ok(derive_scalar(&input))
            } else {
                derive_struct(&input, s)
            }
        }),
        syn::Data::Enum(_) => container_is_scalar(&input).map(|_| derive_scalar(&input)),
        syn::Data::Union(u) => Err(syn::Error::new(
            u.union_token.span(),
            "`Diffable` cannot be derived for unions",
        )),
    };

    result.unwrap_or_else(|err| err.to_compile_error()).into()
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    field: bool,
    rename: Option<String>,
}

fn container_is_scalar(input: &syn::DeriveInput) -> syn::Result<bool> {
    let mut scalar = false;
    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("diff")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("scalar") {
                scalar = true;
                Ok(())
            } else {
                Err(meta.error("unsupported container attribute, expected `scalar`"))
            }
        })?;
    }
    Ok(scalar)
}

fn field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("diff")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                attrs.skip = true;
            } else if meta.path.is_ident("field") {
                attrs.field = true;
            } else if meta.path.is_ident("rename") {
                let name: syn::LitStr = meta.value()?.parse()?;
                if name.value().is_empty() {
                    return Err(syn::Error::new(name.span(), "member name cannot be empty"));
                }
                attrs.rename = Some(name.value());
            } else {
                return Err(meta.error("unsupported field attribute, expected `skip`, `field` or `rename`"));
            }
            Ok(())
        })?;
    }
    if attrs.skip && (attrs.field || attrs.rename.is_some()) {
        return Err(syn::Error::new(field.span(), "`skip` cannot be combined with other attributes"));
    }
    Ok(attrs)
}

/// Add `bound` to every type parameter
fn bounded_generics(input: &syn::DeriveInput, bound: syn::TypeParamBound) -> syn::Generics {
    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(bound.clone());
    }
    generics
}

fn derive_struct(input: &syn::DeriveInput, s: &syn::DataStruct) -> syn::Result<TokenStream> {
    let ty = &input.ident;
    let generics = bounded_generics(input, syn::parse_quote!(::fielddiff::Diffable));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut declarations = Vec::new();
    for (i, field) in s.fields.iter().enumerate() {
        let attrs = field_attrs(field)?;
        if attrs.skip {
            continue;
        }

        let access = match &field.ident {
            Some(ident) => quote! { #ident },
            None => {
                let index = syn::Index::from(i);
                quote! { #index }
            }
        };
        let name = attrs.rename.unwrap_or_else(|| match &field.ident {
            Some(ident) => ident.unraw().to_string(),
            None => i.to_string(),
        });
        let verb = if attrs.field {
            format_ident!("field")
        } else {
            format_ident!("property")
        };

        declarations.push(quote! {
            members.#verb(#name, |this: &Self| &this.#access);
        });
    }

    Ok(quote! {
        impl #impl_generics ::fielddiff::Object for #ty #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn members(members: &mut ::fielddiff::Members<Self>) {
                #(#declarations)*
            }
        }

        impl #impl_generics ::fielddiff::Diffable for #ty #ty_generics #where_clause {
            fn descriptor() -> ::fielddiff::TypeDescriptor {
                ::fielddiff::TypeDescriptor::object::<Self>()
            }

            fn plan_member<__P: 'static>(
                cx: &mut ::fielddiff::PlanContext,
                member: ::fielddiff::Member<__P, Self>,
            ) -> ::core::option::Option<::fielddiff::Step<__P>> {
                cx.nested(member)
            }

            fn plan_elements<__P: 'static>(
                cx: &mut ::fielddiff::PlanContext,
                elements: ::fielddiff::Elements<__P, Self>,
            ) -> ::core::option::Option<::fielddiff::Step<__P>> {
                ::core::option::Option::Some(cx.object_elements(elements))
            }

            fn plan_entries<__P: 'static, __K: ::fielddiff::MapKey>(
                cx: &mut ::fielddiff::PlanContext,
                entries: ::fielddiff::Entries<__P, __K, Self>,
            ) -> ::core::option::Option<::fielddiff::Step<__P>> {
                ::core::option::Option::Some(cx.object_entries(entries))
            }
        }
    })
}

fn derive_scalar(input: &syn::DeriveInput) -> TokenStream {
    let ty = &input.ident;
    let generics = bounded_generics(input, syn::parse_quote!(::fielddiff::Scalar));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    quote! {
        impl #impl_generics ::fielddiff::Scalar for #ty #ty_generics #where_clause {}

        impl #impl_generics ::fielddiff::Diffable for #ty #ty_generics #where_clause {
            fn descriptor() -> ::fielddiff::TypeDescriptor {
                ::fielddiff::TypeDescriptor::scalar::<Self>()
            }

            fn plan_member<__P: 'static>(
                cx: &mut ::fielddiff::PlanContext,
                member: ::fielddiff::Member<__P, Self>,
            ) -> ::core::option::Option<::fielddiff::Step<__P>> {
                ::core::option::Option::Some(cx.scalar(member))
            }

            fn plan_elements<__P: 'static>(
                cx: &mut ::fielddiff::PlanContext,
                elements: ::fielddiff::Elements<__P, Self>,
            ) -> ::core::option::Option<::fielddiff::Step<__P>> {
                ::core::option::Option::Some(cx.scalar_set(elements))
            }

            fn plan_entries<__P: 'static, __K: ::fielddiff::MapKey>(
                cx: &mut ::fielddiff::PlanContext,
                entries: ::fielddiff::Entries<__P, __K, Self>,
            ) -> ::core::option::Option<::fielddiff::Step<__P>> {
                ::core::option::Option::Some(cx.scalar_map(entries))
            }
        }
    }
}
