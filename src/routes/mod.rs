pub mod ask_routes;
