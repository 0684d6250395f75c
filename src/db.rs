pub mod introspect;
