pub mod scatter;
pub mod toc;
