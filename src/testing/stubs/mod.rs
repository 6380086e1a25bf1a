pub mod counting_operator;

pub use counting_operator::CountingOperator;
