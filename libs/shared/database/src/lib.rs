pub mod functions;
pub mod realtime;
pub mod supabase;
