pub mod fixtures;

#[cfg(test)]
mod admin_tests;
#[cfg(test)]
mod batch_tests;
#[cfg(test)]
mod health_tests;
#[cfg(test)]
mod stream_tests;
#[cfg(test)]
mod transcribe_tests;
