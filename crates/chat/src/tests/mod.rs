mod chat_service_tests;
