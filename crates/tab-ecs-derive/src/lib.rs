//! Derive macros for TabEcs components.
//!
//! Board storage copies component values as raw bytes, so every component
//! must be flat, heap-free data. The derives implement the marker traits
//! from `tab_ecs` and reject field types that own heap memory or hold
//! handles, with a hint at the board family to use instead.
//!
//! # Component Families
//!
//! ```ignore
//! // One fixed-size value per row
//! #[derive(Component, Pod, Zeroable, Clone, Copy)]
//! #[repr(C)]
//! struct Position { x: f32, y: f32, z: f32 }
//!
//! // Element of a per-row growable list
//! #[derive(BufferComponent, Pod, Zeroable, Clone, Copy)]
//! #[repr(C)]
//! struct Waypoint { x: f32, y: f32 }
//!
//! // Zero-size marker
//! #[derive(TagComponent)]
//! struct Frozen;
//! ```
//!
//! `Component` and `BufferComponent` still need `bytemuck::Pod`; the trait
//! bounds report a missing derive.
//!
//! # Forbidden Types
//!
//! - `Vec<T>`, `VecDeque<T>` and other collections - use a buffer component
//! - `String` - use a fixed-size byte array or a resource entity
//! - `Box<T>` / `Rc<T>` / `Arc<T>` - share rows between entities instead
//! - `Mutex<T>` / `RwLock<T>` / `Cell<T>` / `RefCell<T>` - the world is single-writer
//! - references, raw pointers, trait objects

use proc_macro::TokenStream;
use quote::{quote, quote_spanned};
use syn::{
    Data, DeriveInput, Fields, GenericArgument, Path, PathArguments, Type, spanned::Spanned,
};

/// Forbidden type patterns, as (type_name, error_message).
const FORBIDDEN_TYPES: &[(&str, &str)] = &[
    (
        "Vec",
        "Vec<T> is not allowed in components. Use a buffer component instead:\n\
         - #[derive(BufferComponent)] on the element type\n\
         - world.add_buffer::<Element>(entity)?.push(value)",
    ),
    (
        "VecDeque",
        "VecDeque<T> is not allowed in components. Use a buffer component and keep \
         a head index in a regular component if FIFO order matters.",
    ),
    (
        "HashMap",
        "HashMap<K, V> is not allowed in components. Store each entry on its own entity, \
         or keep (key, value) pairs in a buffer component.",
    ),
    (
        "HashSet",
        "HashSet<T> is not allowed in components. Use tag components for membership, \
         or a buffer component of members.",
    ),
    (
        "BTreeMap",
        "BTreeMap<K, V> is not allowed in components. Keep sorted (key, value) pairs in a \
         buffer component.",
    ),
    (
        "BTreeSet",
        "BTreeSet<T> is not allowed in components. Keep sorted members in a buffer component.",
    ),
    (
        "String",
        "String is not allowed in components. Alternatives:\n\
         - fixed-size arrays: [u8; 32]\n\
         - a buffer component of bytes\n\
         - a resource entity from GameResourceDb keyed by the string",
    ),
    (
        "Box",
        "Box<T> is not allowed in components. Split T into smaller components, or use \
         marker components for polymorphism.",
    ),
    (
        "Rc",
        "Rc<T> is not allowed in components. Boards reference count rows themselves:\n\
         - world.share(component_type, owner, other) points both entities at one row",
    ),
    (
        "Arc",
        "Arc<T> is not allowed in components. Boards reference count rows themselves:\n\
         - world.share(component_type, owner, other) points both entities at one row",
    ),
    (
        "Mutex",
        "Mutex<T> is not allowed in components. The world has a single writer per tick.",
    ),
    (
        "RwLock",
        "RwLock<T> is not allowed in components. The world has a single writer per tick.",
    ),
    (
        "RefCell",
        "RefCell<T> is not allowed in components. Mutate through world.get_mut() or a \
         mutable accessor.",
    ),
    (
        "Cell",
        "Cell<T> is not allowed in components. Mutate through world.get_mut() or a \
         mutable accessor.",
    ),
    (
        "LinkedList",
        "LinkedList<T> is not allowed in components. Use a buffer component.",
    ),
    (
        "BinaryHeap",
        "BinaryHeap<T> is not allowed in components. Use a buffer component kept in \
         heap order.",
    ),
];

/// Which marker trait a derive implements.
#[derive(Clone, Copy)]
enum Family {
    Single,
    Buffer,
    Tag,
}

impl Family {
    const fn trait_name(self) -> &'static str {
        match self {
            Self::Single => "Component",
            Self::Buffer => "BufferComponent",
            Self::Tag => "TagComponent",
        }
    }
}

/// Derive macro for fixed-size components.
///
/// Implements `tab_ecs::Component` after validating every field type.
/// The type must also implement `bytemuck::Pod`.
///
/// # Examples
///
/// ```ignore
/// #[derive(Component, Pod, Zeroable, Clone, Copy)]
/// #[repr(C)]
/// struct Health { current: u32, max: u32 }
/// ```
#[proc_macro_derive(Component)]
pub fn derive_component(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    expand(&input, Family::Single).into()
}

/// Derive macro for buffer component elements.
///
/// Implements `tab_ecs::BufferComponent` after validating every field
/// type. The type must also implement `bytemuck::Pod`.
#[proc_macro_derive(BufferComponent)]
pub fn derive_buffer_component(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    expand(&input, Family::Buffer).into()
}

/// Derive macro for tag components.
///
/// Implements `tab_ecs::TagComponent`. Only structs without fields are
/// accepted.
#[proc_macro_derive(TagComponent)]
pub fn derive_tag_component(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    expand(&input, Family::Tag).into()
}

fn expand(input: &DeriveInput, family: Family) -> proc_macro2::TokenStream {
    let errors = validate(input, family);
    if !errors.is_empty() {
        return errors.into_iter().collect();
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let trait_ident = syn::Ident::new(family.trait_name(), proc_macro2::Span::call_site());

    quote! {
        impl #impl_generics ::tab_ecs::#trait_ident for #name #ty_generics #where_clause {}
    }
}

fn validate(input: &DeriveInput, family: Family) -> Vec<proc_macro2::TokenStream> {
    let mut errors = Vec::new();
    let trait_name = family.trait_name();

    match (&input.data, family) {
        (Data::Struct(data), Family::Tag) => {
            if !data.fields.is_empty() {
                errors.push(quote_spanned! {
                    data.fields.span() =>
                    compile_error!("TagComponent must be a struct without fields. \
                                    Tags carry no data; use #[derive(Component)] for values.");
                });
            }
        }
        (Data::Struct(data), _) => check_fields(&data.fields, &mut errors),
        (Data::Enum(_), _) => {
            let msg = format!(
                "Enums cannot derive {trait_name}. Board rows are raw bytes: use a \
                 #[repr(transparent)] struct around an integer discriminant instead."
            );
            errors.push(quote_spanned! { input.ident.span() => compile_error!(#msg); });
        }
        (Data::Union(_), _) => {
            let msg = format!("Unions cannot derive {trait_name}. Use a struct instead.");
            errors.push(quote_spanned! { input.ident.span() => compile_error!(#msg); });
        }
    }

    errors
}

fn check_fields(fields: &Fields, errors: &mut Vec<proc_macro2::TokenStream>) {
    for field in fields {
        check_type(&field.ty, errors);
    }
}

fn check_type(ty: &Type, errors: &mut Vec<proc_macro2::TokenStream>) {
    match ty {
        Type::Path(type_path) => {
            check_type_path(&type_path.path, ty.span(), errors);
        }
        Type::Array(array) => check_type(&array.elem, errors),
        Type::Tuple(tuple) => {
            for elem in &tuple.elems {
                check_type(elem, errors);
            }
        }
        Type::Paren(paren) => check_type(&paren.elem, errors),
        Type::Group(group) => check_type(&group.elem, errors),
        Type::Reference(_) => {
            errors.push(quote_spanned! {
                ty.span() =>
                compile_error!("References are not allowed in components. Board rows are \
                                copied as raw bytes; store the value itself.");
            });
        }
        Type::Ptr(_) => {
            errors.push(quote_spanned! {
                ty.span() =>
                compile_error!("Raw pointers are not allowed in components.\n\
                               Use GameEntity to refer to other entities.");
            });
        }
        Type::TraitObject(_) => {
            errors.push(quote_spanned! {
                ty.span() =>
                compile_error!("Trait objects (dyn Trait) are not allowed in components.\n\
                               Use tag components for polymorphism.");
            });
        }
        Type::ImplTrait(_) => {
            errors.push(quote_spanned! {
                ty.span() =>
                compile_error!("impl Trait is not allowed in component fields. Use concrete types.");
            });
        }
        _ => {}
    }
}

fn check_type_path(
    path: &Path,
    span: proc_macro2::Span,
    errors: &mut Vec<proc_macro2::TokenStream>,
) {
    let Some(segment) = path.segments.last() else {
        return;
    };
    let type_name = segment.ident.to_string();

    if let Some((_, message)) = FORBIDDEN_TYPES
        .iter()
        .find(|(forbidden, _)| type_name == *forbidden)
    {
        let error_msg = format!("Component field uses forbidden type `{type_name}`.\n\n{message}");
        errors.push(quote_spanned! {
            span =>
            compile_error!(#error_msg);
        });
        return;
    }

    if let PathArguments::AngleBracketed(args) = &segment.arguments {
        for arg in &args.args {
            if let GenericArgument::Type(inner_ty) = arg {
                check_type(inner_ty, errors);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_for(input: &str, family: Family) -> usize {
        let input: DeriveInput = syn::parse_str(input).unwrap();
        validate(&input, family).len()
    }

    #[test]
    fn test_flat_fields_pass() {
        assert_eq!(
            errors_for("struct Position { x: f32, y: f32, z: f32 }", Family::Single),
            0
        );
        assert_eq!(
            errors_for("struct Grid { cells: [[u8; 4]; 4], origin: (i32, i32) }", Family::Single),
            0
        );
        assert_eq!(
            errors_for("struct Link { target: tab_ecs::GameEntity }", Family::Buffer),
            0
        );
    }

    #[test]
    fn test_forbidden_types_fail() {
        assert_eq!(errors_for("struct A { items: Vec<u32> }", Family::Single), 1);
        assert_eq!(errors_for("struct B(String, Box<u8>);", Family::Buffer), 2);
        assert_eq!(errors_for("struct C { nested: [Option<Arc<u8>>; 2] }", Family::Single), 1);
        assert_eq!(errors_for("struct D<'a> { r: &'a u32 }", Family::Single), 1);
        assert_eq!(errors_for("struct E { p: *const u8 }", Family::Single), 1);
    }

    #[test]
    fn test_enums_and_unions_fail() {
        assert_eq!(errors_for("enum Mode { A, B }", Family::Single), 1);
        assert_eq!(errors_for("union U { a: u32, b: f32 }", Family::Buffer), 1);
    }

    #[test]
    fn test_tags_must_be_empty() {
        assert_eq!(errors_for("struct Frozen;", Family::Tag), 0);
        assert_eq!(errors_for("struct Frozen {}", Family::Tag), 0);
        assert_eq!(errors_for("struct Frozen(u8);", Family::Tag), 1);
    }

    #[test]
    fn test_expansion_names_the_trait() {
        let input: DeriveInput = syn::parse_str("struct Frozen;").unwrap();
        let tokens = expand(&input, Family::Tag).to_string();

        assert!(tokens.contains("TagComponent"));
        assert!(tokens.contains("Frozen"));
    }
}
