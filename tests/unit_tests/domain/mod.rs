mod input_ref_test;
mod job_state_test;
mod model_name_test;
