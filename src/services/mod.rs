pub mod billplz;
