// Test modules for Portsync
// Each module covers the corresponding source module; shared fakes live in helpers

mod helpers;
