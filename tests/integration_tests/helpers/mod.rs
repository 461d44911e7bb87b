mod test_postgres;

pub use test_postgres::TestPostgres;
pub use test_redis::TestRedis;
