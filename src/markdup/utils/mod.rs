pub(crate) mod library_id_generator;
pub mod optical_duplicate_finder;
pub mod physical_location;
pub mod read_name_parser;
