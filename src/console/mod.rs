pub mod command_interface;
