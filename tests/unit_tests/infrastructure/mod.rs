mod in_memory_job_store_test;
mod in_memory_result_cache_test;
mod settings_test;
