mod channel;
mod helpers;
mod supervisor;
mod transfer;
