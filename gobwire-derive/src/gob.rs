use {
    crate::common::{get_crate_name, GobArgs},
    darling::{FromDeriveInput, Result},
    proc_macro2::TokenStream,
    quote::quote,
    syn::{parse_quote, DeriveInput, GenericParam},
};

pub(crate) fn generate(input: DeriveInput) -> Result<TokenStream> {
    let args = GobArgs::from_derive_input(&input)?;
    let crate_name = get_crate_name(&args);
    let ident = &args.ident;
    let type_name = args.name.clone().unwrap_or_else(|| ident.to_string());

    let mut generics = args.generics.clone();
    for param in &mut generics.params {
        if let GenericParam::Type(param) = param {
            param.bounds.push(parse_quote!(#crate_name::Gob));
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let all = &args.fields().fields;
    let wire: Vec<_> = all.iter().filter(|f| !f.skip).collect();

    let descriptors = wire.iter().map(|field| {
        let name = field.wire_name();
        let ty = &field.ty;
        quote! {
            LocalField { name: #name, ty: LocalType::of::<#ty>() }
        }
    });

    let zeros = all.iter().map(|field| {
        let member = &field.ident;
        let ty = &field.ty;
        if field.skip {
            quote! { #member: ::core::default::Default::default() }
        } else {
            quote! { #member: <#ty as Gob>::zero() }
        }
    });

    // Field numbers are positions among the reflected fields only.
    let getters = wire.iter().enumerate().map(|(i, field)| {
        let member = &field.ident;
        quote! { #i => Some(&self.#member) }
    });
    let setters = wire.iter().enumerate().map(|(i, field)| {
        let member = &field.ident;
        quote! { #i => Some(&mut self.#member) }
    });

    Ok(quote! {
        const _: () = {
            #[allow(unused_imports)]
            use #crate_name::{Gob, Kind, LocalField, LocalType, StructAccess, StructKind, StructMut, View, ViewMut};

            impl #impl_generics Gob for #ident #ty_generics #where_clause {
                fn kind() -> Kind {
                    Kind::Struct(StructKind {
                        name: #type_name,
                        fields: vec![#(#descriptors),*],
                    })
                }

                fn zero() -> Self {
                    Self { #(#zeros),* }
                }

                #[inline]
                fn view(&self) -> View<'_> {
                    View::Struct(self)
                }

                #[inline]
                fn view_mut(&mut self) -> ViewMut<'_> {
                    ViewMut::Struct(self)
                }
            }

            impl #impl_generics StructAccess for #ident #ty_generics #where_clause {
                #[allow(clippy::match_single_binding)]
                fn field(&self, index: usize) -> Option<&dyn Gob> {
                    match index {
                        #(#getters,)*
                        _ => None,
                    }
                }
            }

            impl #impl_generics StructMut for #ident #ty_generics #where_clause {
                #[allow(clippy::match_single_binding)]
                fn field_mut(&mut self, index: usize) -> Option<&mut dyn Gob> {
                    match index {
                        #(#setters,)*
                        _ => None,
                    }
                }
            }
        };
    })
}
