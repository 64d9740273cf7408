pub mod app;
pub mod config;
pub mod demo_seeder;
pub mod error;
pub mod api {
    pub mod errors;
    pub mod render;
    pub mod search;
}
pub mod db {
    pub mod memory;
    pub mod models;
    pub mod repository;
}
pub mod editor {
    pub mod session;
}
pub mod rendering {
    pub mod links;
    pub mod reference;
}
pub mod scan {
    pub mod markers;
    pub mod scanner;
}
pub mod search {
    pub mod formatter;
    pub mod service;
}
