mod redis_queue_broker_test;
