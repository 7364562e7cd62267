mod system_test;
