pub mod generation_worker;
