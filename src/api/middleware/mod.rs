//! API middleware stack. CORS is applied by the router; access logging
//! wraps every route.

pub mod access_log;
