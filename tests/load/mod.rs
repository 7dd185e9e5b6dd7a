pub mod concurrent_requests;
