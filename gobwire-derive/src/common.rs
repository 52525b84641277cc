use {
    darling::{
        ast::{Data, Fields},
        util::Ignored,
        FromDeriveInput, FromField,
    },
    syn::{parse_quote, Generics, Ident, Path, Type},
};

#[derive(FromField)]
#[darling(attributes(gob))]
pub(crate) struct Field {
    pub(crate) ident: Option<Ident>,
    pub(crate) ty: Type,
    /// Leave the field out of the wire representation. It decodes as `Default::default()`.
    #[darling(default)]
    pub(crate) skip: bool,
    /// Name used on the wire instead of the Rust identifier.
    #[darling(default)]
    pub(crate) rename: Option<String>,
}

impl Field {
    /// The field name sent in the type descriptor.
    pub(crate) fn wire_name(&self) -> String {
        match (&self.rename, &self.ident) {
            (Some(rename), _) => rename.clone(),
            (None, Some(ident)) => ident.to_string(),
            (None, None) => unreachable!("named structs have identifiers"),
        }
    }
}

#[derive(FromDeriveInput)]
#[darling(attributes(gob), supports(struct_named))]
pub(crate) struct GobArgs {
    pub(crate) ident: Ident,
    pub(crate) generics: Generics,
    pub(crate) data: Data<Ignored, Field>,
    /// Type name sent in the descriptor. Defaults to the Rust identifier.
    #[darling(default)]
    pub(crate) name: Option<String>,
    /// Path to the gobwire crate, for use from re-exporting crates.
    #[darling(default, rename = "crate")]
    pub(crate) crate_path: Option<Path>,
}

impl GobArgs {
    pub(crate) fn fields(&self) -> &Fields<Field> {
        match &self.data {
            Data::Struct(fields) => fields,
            Data::Enum(_) => unreachable!("darling only accepts named structs"),
        }
    }
}

pub(crate) fn get_crate_name(args: &GobArgs) -> Path {
    args.crate_path
        .clone()
        .unwrap_or_else(|| parse_quote!(::gobwire))
}
