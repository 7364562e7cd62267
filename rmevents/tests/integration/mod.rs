mod idle_test;
mod pool_test;
mod system_test;
mod wakeup_test;
