mod helpers;
mod infrastructure;
