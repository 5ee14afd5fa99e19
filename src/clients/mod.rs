//! Clients for the hosted services this API fronts.

pub mod supabase;

pub use supabase::SupabaseClient;
