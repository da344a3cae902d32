mod helpers;

mod cv_ref_tests;
mod read_tests;
mod rehash_tests;
