pub mod fsutils;
pub mod work_queue;
pub mod workers;
