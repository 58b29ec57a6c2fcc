pub mod financial;
pub mod materiality;
pub mod report;
pub mod standards;
