pub mod lab;
pub mod net;
pub mod sim;

#[cfg(test)]
mod test;
