pub mod group_writer;
pub mod notification_reader;
